use crate::todo::todo_model::TodoModel;
use crate::todo::todo_view::show_todos;
use crate::tracing_setup::tracing_init;
use easefetch::EaseFetchStreamExt;
use futures::StreamExt;
use std::time::Duration;
use tracing::info;

mod todo;
mod tracing_setup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let storage_file = std::env::temp_dir().join("easefetch_demo_local_storage.json");
    info!("persistent storage: {}", storage_file.display());
    let started = chrono::Local::now();

    for session in 1..=2 {
        info!("---------- session {session} ----------");
        let model = TodoModel::new(&storage_file)?;

        // From the second session on, the pinned list comes from the file.
        info!("pinned list served from cache: {}", model.pinned().get_state().is_success());
        show_todos(&model.pinned().settled().await);

        show_todos(&model.paged().settled().await);

        // Superseded before it settles: page 0 never shows up.
        model.show_page(0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        model.show_page(2);
        model
            .paged()
            .to_stream()
            .until_settled()
            .for_each(|state| {
                show_todos(&state);
                async {}
            })
            .await;

        model.show_page(0);
        show_todos(&model.paged().settled().await);
    }

    info!("=================================");
    info!(
        "  Main thread | Finish in {}ms",
        (chrono::Local::now() - started).num_milliseconds()
    );
    Ok(())
}
