use crate::{
    modules::{
        api::{
            filters::{with_allowed_addr, with_form, with_state},
            handlers::{consume_handler, house_image_handler, input_handler},
            swagger::HouseDoc,
        },
        house::HouseState,
    },
    shared::errors::handle_rejection,
};
use std::convert::Infallible;
use utoipa::OpenApi;
use warp::Filter;

pub fn routes(
    state: HouseState,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let api_doc = warp::path!("api-doc.json")
        .and(warp::get())
        .map(|| warp::reply::json(&HouseDoc::openapi()));

    api_doc
        .or(input_route(state.clone()))
        .or(house_route(state.clone()))
        .or(consume_route(state))
        .recover(handle_rejection)
}

/// POST /house/input/
pub fn input_route(
    state: HouseState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("house" / "input")
        .and(warp::post())
        .and(with_allowed_addr(state.configs.ingest.clone()))
        .and(with_form())
        .and(with_state(state))
        .and_then(input_handler)
}

/// GET /house/
pub fn house_route(
    state: HouseState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("house")
        .and(warp::get())
        .and(with_state(state))
        .and_then(house_image_handler)
}

/// GET or POST /cron/house/consume/
pub fn consume_route(
    state: HouseState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("cron" / "house" / "consume")
        .and(warp::get().or(warp::post()).unify())
        .and(with_state(state))
        .and_then(consume_handler)
}
