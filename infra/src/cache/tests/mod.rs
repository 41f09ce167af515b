mod select_store_tests;
