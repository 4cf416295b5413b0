// API module entry
// Registers the author/score endpoints and the health probes on the router

mod handlers;

use crate::config::RoutesConfig;
use crate::handler::Router;
use crate::logger;
use crate::routing::RouteError;

/// Register every application route.
///
/// Any conflict aborts startup.
pub fn register_routes(router: &mut Router, routes: &RoutesConfig) -> Result<(), RouteError> {
    router
        .get("/authorById/:id")
        .produces("text/json")
        .handler(handlers::get_author_by_id)?;
    router
        .get("/scoreById/:id")
        .produces("text/json")
        .handler(handlers::get_score_by_id)?;
    router
        .delete("/deleteAuthorByIdFails/:id")
        .handler(handlers::delete_author_by_id_fails)?;
    router
        .put("/addNewAuthor")
        .consumes("application/json")
        .produces("application/json")
        .handler(handlers::add_new_author)?;

    if routes.health.enabled {
        router
            .get(&routes.health.liveness_path)
            .handler(handlers::health)?;
        router
            .get(&routes.health.readiness_path)
            .handler(handlers::health)?;
    }

    for route in router.routes().iter() {
        logger::log_route_registered(route.method.as_str(), route.pattern.as_str());
    }
    Ok(())
}
