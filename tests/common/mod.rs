//! Common test infrastructure
//!
//! In-process fakes for every collaborator of the recommendation pipeline,
//! and [`TestPipeline`], which wires them to a real SQLite artist cache in a
//! temporary directory driven by a manual clock.
//!
//! ```no_run
//! mod common;
//! use common::{FakeCatalog, TestPipeline};
//!
//! #[tokio::test]
//! async fn recommends_something() {
//!     let catalog = FakeCatalog::new("fake").confirming(&["Artist C"]);
//!     let env = TestPipeline::new(&["Artist A"], &["Artist C"], catalog);
//!
//!     let response = env.run(5).await.unwrap();
//!     assert_eq!(response.artists.len(), 1);
//! }
//! ```

mod fakes;
mod fixtures;

pub use fakes::{FakeCatalog, FakePlaylists, ScriptedSuggestions};
pub use fixtures::{TestPipeline, PLAYLIST_NAME};
