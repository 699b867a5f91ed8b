//! Page command handlers: open, list, show, sanitize.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use draion_core::editor::{codec, node, render_preview};
use draion_core::page::list_pages;
use draion_core::utils::{display_offset, format_timestamp};
use draion_core::{
    Document, DocumentStore, DocumentView, FileStore, PageId, SyncEngine,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::Context;

const HELP: &str = "Type a line to add it to the page. Shortcuts while typing:
  - item         bullet list (continues on the next line)
  /ol item       numbered list (continues on the next line)
  [] item        checkbox (also /check)
  ---            divider (also /div)
Commands:
  :check              insert a checkbox at the caret
  :div                insert a divider at the caret
  :toggle <id>        toggle a checkbox in the editor
  :tick <id> on|off   set a checkbox from the preview side
  :show               print the page text and preview
  :help               show this help
  :quit               save pending edits and leave
Edits made by other `draion` processes are not shown live; reopen the page to see them.";

fn runtime() -> Option<tokio::runtime::Runtime> {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => Some(rt),
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            None
        }
    }
}

fn open_store(ctx: &Context) -> Option<Arc<FileStore>> {
    match FileStore::open(&ctx.store_dir) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn print_metadata(ctx: &Context, page_id: &PageId, document: &Document) {
    let offset = display_offset(ctx.config.display.utc_offset_minutes);
    println!("{} ({})", document.name, page_id);
    println!(
        "  created {}  modified {}",
        format_timestamp(&document.created_at, offset),
        format_timestamp(&document.last_modified, offset)
    );
}

/// Handle `draion open <name>`.
pub fn handle_open(ctx: &Context, name: &str) -> bool {
    let Some(store) = open_store(ctx) else {
        return false;
    };
    let Some(rt) = runtime() else {
        return false;
    };

    rt.block_on(async {
        let view = Arc::new(Mutex::new(DocumentView::new()));
        let mut engine = SyncEngine::new(store, Arc::clone(&view), ctx.config.sync.clone())
            .with_page_rules(ctx.config.pages.clone());

        let (page_id, document) = match engine.open_page(name).await {
            Ok(opened) => opened,
            Err(e) => {
                eprintln!("Error: {}", e);
                return false;
            }
        };

        print_metadata(ctx, &page_id, &document);
        let text = lock(&view).text_content();
        if !text.is_empty() {
            println!("{}", text);
        }
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    break;
                }
            };

            match line.trim() {
                ":quit" => break,
                ":help" => println!("{}", HELP),
                ":check" => {
                    let id = lock(&view).insert_checkbox();
                    println!("Added {}", id);
                }
                ":div" => lock(&view).insert_divider(),
                ":show" => {
                    let view = lock(&view);
                    println!("{}", view.text_content());
                    println!("--- preview ---");
                    println!("{}", view.preview_html());
                }
                command if command.starts_with(":tick") => {
                    let mut parts = command.trim_start_matches(":tick").split_whitespace();
                    let (Some(id), Some(state)) = (parts.next(), parts.next()) else {
                        eprintln!("Usage: :tick <id> on|off");
                        continue;
                    };
                    let checked = match state {
                        "on" => true,
                        "off" => false,
                        _ => {
                            eprintln!("Usage: :tick <id> on|off");
                            continue;
                        }
                    };
                    if !lock(&view).sync_checkbox_from_preview(id, checked) {
                        eprintln!("No checkbox with id {:?}", id);
                    }
                }
                command if command.starts_with(":toggle") => {
                    let id = command.trim_start_matches(":toggle").trim();
                    if !lock(&view).toggle_checkbox(id) {
                        eprintln!("No checkbox with id {:?}", id);
                    }
                }
                _ => {
                    let mut view = lock(&view);
                    view.insert_text(&line);
                    view.insert_line_break();
                }
            }
        }

        // Closing drops anything still waiting on a debounce timer.
        let config = &ctx.config.sync;
        let wait = config.text_debounce().max(config.checkbox_debounce()) + Duration::from_millis(100);
        tokio::time::sleep(wait).await;

        if let Some(stats) = engine.close_session().await {
            println!(
                "Saved {} time(s), applied {} remote change(s)",
                stats.persists_written, stats.remote_applied
            );
            if stats.write_failures > 0 {
                eprintln!(
                    "Warning: {} save(s) failed; the last edits may not be stored",
                    stats.write_failures
                );
            }
        }
        true
    })
}

/// Handle `draion list`.
pub fn handle_list(ctx: &Context) -> bool {
    let Some(store) = open_store(ctx) else {
        return false;
    };
    let Some(rt) = runtime() else {
        return false;
    };

    let pages = rt.block_on(list_pages(store.as_ref()));
    if pages.is_empty() {
        println!("No pages yet. Create one with `draion open <name>`.");
        return true;
    }

    let offset = display_offset(ctx.config.display.utc_offset_minutes);
    for (page_id, document) in pages {
        println!(
            "{:<30} {:<30} {}",
            page_id.as_str(),
            document.name,
            format_timestamp(&document.last_modified, offset)
        );
    }
    true
}

/// Handle `draion show <name>`.
pub fn handle_show(ctx: &Context, name: &str) -> bool {
    let page_id = match PageId::parse(name) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };
    let Some(store) = open_store(ctx) else {
        return false;
    };
    let Some(rt) = runtime() else {
        return false;
    };

    let document = match rt.block_on(store.read(&page_id)) {
        Ok(Some(document)) => document,
        Ok(None) => {
            eprintln!("No page named {:?} ({})", name, page_id);
            return false;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };

    let nodes = codec::decode(&document.content);
    print_metadata(ctx, &page_id, &document);
    println!();
    println!("{}", node::text_content(&nodes));
    println!("--- preview ---");
    println!("{}", render_preview(&nodes));
    true
}

/// Handle `draion sanitize <name>`.
pub fn handle_sanitize(name: &str) -> bool {
    match PageId::parse(name) {
        Ok(page_id) => {
            println!("{}", page_id);
            true
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}

fn lock(view: &Mutex<DocumentView>) -> std::sync::MutexGuard<'_, DocumentView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}
