// Request and response mappers

pub mod dokumentlista;
pub mod organisationer;
