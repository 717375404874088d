//! Request pipeline of a multi-tenant API explorer.
//!
//! Route templates and editor rows are turned into a validated
//! [`RequestConfig`](types::RequestConfig) by the [`editor`], sent by the
//! [`executor`] (one request in flight at a time, cancellable), and the
//! normalized [`ApiResponse`](types::ApiResponse) is observed through the
//! executor's state. Presets, the route registry, header policy and the local
//! store are the collaborators around that pipeline.

pub mod code_formatter;
pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod policy;
pub mod presets;
pub mod registry;
pub mod response_view;
pub mod store;
pub mod types;
pub mod url_params;
pub mod validation;

pub use config::ExplorerConfig;
pub use editor::{EditorTab, RequestEditor, RowKind};
pub use error::ExplorerError;
pub use executor::{ExecutorSnapshot, RequestExecutor, RequestHandle};
pub use lifecycle::AppContext;
pub use policy::{HeaderPolicy, Role, SessionContext};
pub use presets::{apply_preset, Preset, PresetCatalog, TeamCache};
pub use registry::{Endpoint, RouteRegistry};
pub use store::Database;
pub use types::{
    ApiResponse, AuthType, HttpMethod, KeyValuePair, PathParam, RequestConfig, RequestStatus,
    ResponseBody,
};
