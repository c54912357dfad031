pub mod validation_tests;
pub mod verify_tests;
