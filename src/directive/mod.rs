//! Turns free-text location descriptions into structured directives through
//! a language model.

mod prompt;
mod resolver;
mod transport;
mod types;
#[cfg(test)]
mod tests;

pub use resolver::{DirectiveCache, DirectiveResolver};
pub use transport::{CommandModel, DirectiveModel};
pub use types::{LocationDirective, Placement, Side, Vertical};
#[cfg(test)]
pub use types::{LateralOffset, VerticalOffset};
