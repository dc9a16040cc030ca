use std::sync::Arc;

pub use mediator::DefaultAsyncMediator;

use crate::audit::Auditor;

pub mod middleware;

pub type AppMediator = DefaultAsyncMediator;

pub fn build_mediator(auditor: Arc<Auditor>) -> AppMediator {
    DefaultAsyncMediator::builder()
        // Audits
        .add_handler({
            let auditor = auditor.clone();
            move |query| {
                let auditor = auditor.clone();
                async move { crate::features::audits::queries::history::handle(auditor, query).await }
            }
        })
        .add_handler({
            let auditor = auditor.clone();
            move |query| {
                let auditor = auditor.clone();
                async move { crate::features::audits::queries::get::handle(auditor, query).await }
            }
        })
        .add_handler({
            let auditor = auditor.clone();
            move |cmd| {
                let auditor = auditor.clone();
                async move { crate::features::audits::commands::restore::handle(auditor, cmd).await }
            }
        })
        .build()
}
