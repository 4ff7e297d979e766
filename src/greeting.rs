pub mod greeter;
pub mod validator;
