mod container_tests;
mod helpers;
mod registry_tests;
