use super::handlers;
use crate::shared::errors::ErrorMessage;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::input_handler,
        handlers::house_image_handler,
        handlers::consume_handler
    ),
    components(schemas(ErrorMessage)),
    tags( (name = "House API", description = "Sensor ingest and floor plan rendering") )
)]
pub struct HouseDoc;
