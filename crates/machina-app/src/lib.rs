mod controller;

pub use controller::{ExpandOutcome, ExpansionController, TreeHandle};
