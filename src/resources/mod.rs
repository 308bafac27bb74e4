//! Built-in resources.
//!
//! | Code    | Paths               | Actions                        |
//! |---------|---------------------|--------------------------------|
//! | `echo`  | `echo`              | `read`                         |
//! | `docs`  | `db/<collection>`   | `read`, `write`, `delete`      |
//! | `cache` | `cache/<key>`       | `read`, `write`, `delete`      |

pub mod cache;
pub mod documents;
pub mod echo;

pub use cache::CacheResource;
pub use documents::DocumentStore;
pub use echo::EchoResource;

use crate::resource::ResourceManager;

/// Register every built-in resource on `manager`.
pub fn register_builtin(manager: &ResourceManager) {
    manager.register_resource(EchoResource);
    manager.register_resource(DocumentStore::new());
    manager.register_resource(CacheResource::new());
}
