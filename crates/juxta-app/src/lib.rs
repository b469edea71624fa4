// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod collapse;
pub mod diff;
pub mod hierarchy;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod query;
pub mod search;
pub mod state;
pub mod table;
pub mod versions;
pub mod view;

pub use collapse::*;
pub use diff::*;
pub use hierarchy::*;
pub use ids::*;
pub use model::*;
pub use normalize::*;
pub use query::*;
pub use search::*;
pub use state::*;
pub use table::*;
pub use versions::*;
pub use view::*;
