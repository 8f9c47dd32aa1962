mod balancing_test;
