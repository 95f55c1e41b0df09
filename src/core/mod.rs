// Core modules implementing the tabular model, flattening, and error modeling.
pub mod error;
pub mod flatten;
pub mod table;
