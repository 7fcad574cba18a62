pub mod raid;
pub mod signup;
