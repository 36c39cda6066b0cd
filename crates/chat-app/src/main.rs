use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{Root, ThemeRegistry};
use tracing_subscriber::EnvFilter;

use parley::app::{AppShell, Quit, default_themes_path};
use parley::services::Services;
use parley::settings::SettingsStore;

/// Bootstraps tracing, the Tokio bridge, gpui-component and the main window.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);

        // Required before any Root usage.
        gpui_component::init(cx);

        let settings_store = SettingsStore::load();
        let settings = settings_store.settings();

        // Themes directory is optional; built-in themes are the fallback.
        let theme_settings = settings.clone();
        if let Err(err) = ThemeRegistry::watch_dir(default_themes_path(), cx, move |cx| {
            theme_settings.apply_theme(None, cx);
            tracing::info!("theme directory watch initialized");
        }) {
            tracing::warn!("failed to watch themes directory: {err}, using default themes");
            settings.apply_theme(None, cx);
        }

        let services = Services::from_settings(&settings, &settings_store);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });
        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(960.), px(720.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        title: Some("Parley".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let notifications = cx.new(|cx| NotificationList::new(window, cx));
                    let shell = cx.new(|cx| AppShell::new(services, notifications, window, cx));

                    // Root hosts gpui-component overlays.
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
