// Reconciled game context and the manager that maintains it.

pub mod manager;
pub mod model;

pub use manager::{ContextSources, GameContextManager, ManagerSettings};
pub use model::{ChampionSource, ContextEvent, GameContext};
