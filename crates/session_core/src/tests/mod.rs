mod support;

mod tabs_tests;
