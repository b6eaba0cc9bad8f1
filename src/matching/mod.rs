//! Op matching.
//!
//! A request ([`OpRef`]) names an op, the shapes the caller can use, and the
//! arguments it will bind. The [`Matcher`] narrows the registry's candidates
//! with [`query`], scores the rest, and hands back one initialized
//! [`OpHandle`](crate::special::OpHandle) or a structured error naming every
//! candidate it considered.

pub mod environment;
pub mod matcher;
pub mod oref;
pub mod query;
pub mod registry;

pub use environment::{OpEnvironment, OpRequest};
pub use matcher::{Matcher, Score};
pub use oref::{OpRef, OpRefBuilder};
pub use query::{query, query_with_report, SpecialOps};
pub use registry::{
    Candidate, OpArgs, OpEntry, OpInfo, OpInfoBuilder, OpRegistry, PluginIndex, PortDef, Priority,
    ViewFactory, ViewTable, Views,
};
