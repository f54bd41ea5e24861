// Common tools shared by the handlers

pub mod validation;
