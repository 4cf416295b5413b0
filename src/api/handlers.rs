// Author/score endpoint handlers
//
// Every store access runs inside `RequestContext::with_session`, which
// offloads it to the blocking pool and releases the session on all exit paths.

use hyper::StatusCode;

use crate::failure::Failure;
use crate::handler::{HandlerResult, Reply, RequestContext};
use crate::store::NewAuthor;

/// `GET /authorById/:id`
pub async fn get_author_by_id(ctx: RequestContext) -> HandlerResult {
    let id = ctx.id_param("id")?;
    let author = ctx
        .with_session(move |session| {
            session
                .find_author(id)?
                .ok_or_else(|| Failure::not_found(format!("author {id} not found")))
        })
        .await?;
    Reply::json(&author)
}

/// `GET /scoreById/:id`
pub async fn get_score_by_id(ctx: RequestContext) -> HandlerResult {
    let id = ctx.id_param("id")?;
    let score = ctx
        .with_session(move |session| {
            session
                .find_score(id)?
                .ok_or_else(|| Failure::not_found(format!("score {id} not found")))
        })
        .await?;
    Reply::json(&score)
}

/// `PUT /addNewAuthor`
pub async fn add_new_author(ctx: RequestContext) -> HandlerResult {
    let new_author: NewAuthor = serde_json::from_str(ctx.body_str()?).map_err(|e| {
        Failure::internal(format!("failed to decode author: {e}")).with_cause(e)
    })?;

    let author = ctx
        .with_session(move |session| {
            let author = session.persist_author(new_author)?;
            session.commit()?;
            Ok(author)
        })
        .await?;
    Reply::json(&author)
}

/// `DELETE /deleteAuthorByIdFails/:id`: always fails with 404
#[allow(clippy::unused_async)]
pub async fn delete_author_by_id_fails(_ctx: RequestContext) -> HandlerResult {
    Err(Failure::status(StatusCode::NOT_FOUND))
}

/// Liveness/readiness probe
#[allow(clippy::unused_async)]
pub async fn health(_ctx: RequestContext) -> HandlerResult {
    Ok(Reply::text("ok"))
}
