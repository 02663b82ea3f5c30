//! School demo
//!
//! Loads resources from `school.yaml`, seeds a teacher with one course and
//! serves the REST API. Course keys are generated, so list them first:
//!
//! ```text
//! curl localhost:3000/teachers/1/courses
//! curl -X POST localhost:3000/students -H 'content-type: application/json' \
//!      -d '{"pk": "ada", "name": "Ada", "@links": {"courses": [{"@target": "<course key>"}]}}'
//! curl -X OPTIONS localhost:3000/
//! ```

use resource_graph::prelude::*;
use resource_graph::server::exposure::RestExposure;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const SCHOOL: &str = include_str!("school.yaml");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resource_graph=debug,tower_http=info")),
        )
        .init();

    let mut builder = GraphBuilder::new()
        .with_identity_resolver(HeaderResolver)
        .with_config(GraphConfig::from_yaml_str(SCHOOL)?);
    let registry = Arc::new(builder.build_registry()?);

    seed(&registry).await?;

    let app = RestExposure::build_router(registry, Vec::new())?;
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("School API listening on http://127.0.0.1:3000");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn seed(registry: &Registry) -> Result<()> {
    let admin = registry.entry_point_for(AuthContext::Admin {
        admin_id: Uuid::new_v4(),
    })?;

    let teacher = admin
        .resource("teachers")?
        .create(&json!({"pk": 1, "name": "Grace Hopper"}), &Value::Null)
        .await?;
    let course = admin
        .resource("courses")?
        .create(
            &json!({"title": "Compilers"}),
            &json!({"teacher": {"@target": teacher.serialized_key()}}),
        )
        .await?;

    tracing::info!(
        teacher = %teacher.serialized_key(),
        course = %course.serialized_key(),
        "seeded school"
    );
    Ok(())
}
