//! sheaf - a static site builder with front matter, ERB-style templates,
//! layouts, collections and build hooks.
//!
//! The `sheaf` binary drives [`Site`] from the command line. Hosts that want
//! their own hooks or helpers link the library and register them before
//! building:
//!
//! ```no_run
//! use sheaf::{Hook, HookRegistrar, Plugin, Site, Value};
//!
//! struct Banner;
//!
//! impl Plugin for Banner {
//!     fn name(&self) -> &str {
//!         "banner"
//!     }
//!
//!     fn register(&self, hooks: &mut HookRegistrar<'_>) {
//!         hooks.hook(Hook::after_render(|html, _, _| Ok(format!("{html}<!-- banner -->"))));
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut site = Site::new("src").with_env("production");
//!     site.plugin(Banner).helper("shout", |args: &[Value]| {
//!         let text = args.first().map(ToString::to_string).unwrap_or_default();
//!         Ok(Value::from(text.to_uppercase()))
//!     });
//!     let report = site.build()?;
//!     println!("{} pages", report.pages);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod frontmatter;
pub mod helpers;
pub mod hooks;
mod layout;
pub mod logger;
pub mod plugins;
pub mod site;
pub mod template;
pub mod value;
pub mod watch;

pub use config::SiteConfig;
pub use helpers::Helpers;
pub use hooks::{Hook, HookRegistrar, Plugin, Stage};
pub use site::{BuildReport, Page, Site};
pub use template::RenderScope;
pub use value::{Map, Value};
