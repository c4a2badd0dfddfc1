mod filters;
mod handlers;
mod routes;
mod swagger;

use crate::modules::house::HouseState;
use tokio::task::JoinHandle;

pub fn start_api(state: HouseState) -> JoinHandle<()> {
    let addr = (state.configs.server.host, state.configs.server.port);

    tokio::spawn(async move {
        let routes = routes::routes(state);

        log::info!("Starting API on {}:{}...", addr.0, addr.1);
        warp::serve(routes).run(addr).await;
    })
}
