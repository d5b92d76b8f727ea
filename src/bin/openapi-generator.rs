//! Print the OpenAPI document of the HTTP API as JSON.

use utoipa::OpenApi;
use watch_together_back::services::documentation::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
