use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::session_registry::SessionRegistry;
use crate::vector_store::VectorStore;
use crate::windowing::WindowingHandle;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub vectors: Arc<VectorStore>,
    pub windowing: WindowingHandle,
    pub started_at: Instant,
    pub pool: PgPool,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        vectors: VectorStore,
        windowing: WindowingHandle,
    ) -> Self {
        AppState {
            sessions: Arc::new(SessionRegistry::new(pool.clone())),
            vectors: Arc::new(vectors),
            windowing,
            started_at: Instant::now(),
            pool,
        }
    }
}
