mod locale;
mod middleware;
mod public;

pub use locale::locale_routing;
pub use public::{HttpState, RenderContext, build_app, build_router};
