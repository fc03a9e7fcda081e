mod shutdown_test;
