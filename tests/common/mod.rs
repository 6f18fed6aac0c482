#![allow(dead_code)]

use screen_discovery::device::fake::{FakeApp, FakeScreen};
use screen_discovery::explorer::app_map::{ExplorerConfig, ScreenMap};
use screen_discovery::explorer::crawler::{CrawlOutcome, crawl};
use screen_discovery::explorer::screenshots::NoScreenshots;
use screen_discovery::explorer::world_state::{PrefValue, WorldState};
use screen_discovery::screen::element::{Element, ElementRole, Snapshot};
use screen_discovery::screen::fingerprint::ScreenHasher;
use screen_discovery::trace::logger::TraceLogger;

// =========================================================================
// Fake apps
// =========================================================================

/// Home with "Settings" and "Help", each a static screen with a nav-bar
/// back button.
pub fn settings_help_app() -> FakeApp {
    FakeApp::new("home")
        .screen(
            "home",
            FakeScreen::new()
                .text("Home")
                .button("Settings", "settings")
                .button("Help", "help"),
        )
        .screen(
            "settings",
            FakeScreen::new()
                .nav_back("Back", "home")
                .text("Settings")
                .text("Dark mode"),
        )
        .screen(
            "help",
            FakeScreen::new()
                .nav_back("Back", "home")
                .text("Help")
                .text("FAQ"),
        )
}

fn tab_bar(screen: FakeScreen) -> FakeScreen {
    screen
        .tab("Home", "home_tab")
        .tab("Search", "search_tab")
        .tab("Profile", "profile_tab")
}

/// Onboarding-only screen by default; a 3-tab home once
/// `onboardingDone` is true.
pub fn onboarding_app() -> FakeApp {
    FakeApp::new("onboarding")
        .screen(
            "onboarding",
            FakeScreen::new()
                .text("Welcome")
                .text("Let's get you set up"),
        )
        .screen("home_tab", tab_bar(FakeScreen::new().text("Home feed")))
        .screen("search_tab", tab_bar(FakeScreen::new().text("Search")))
        .screen("profile_tab", tab_bar(FakeScreen::new().text("Profile")))
        .root_when(onboarded(), "home_tab")
}

pub fn onboarded() -> WorldState {
    WorldState::empty().with("onboardingDone", PrefValue::Bool(true))
}

pub fn premium() -> WorldState {
    WorldState::empty().with("premium", PrefValue::Bool(true))
}

/// Root with `n` buttons, each opening a distinct screen with a back button.
pub fn fan_out_app(n: usize) -> FakeApp {
    let mut home = FakeScreen::new().text("Hub");
    let mut app = FakeApp::new("hub");
    for i in 0..n {
        let id = format!("leaf{}", i);
        home = home.button(&format!("Item {}", i), &id);
        app = app.screen(
            &id,
            FakeScreen::new()
                .nav_back("Back", "hub")
                .text(&format!("Leaf {}", i)),
        );
    }
    app.screen("hub", home)
}

/// Linear chain L0 -> L1 -> ... -> L{n-1}, each with a back button.
pub fn chain_app(n: usize) -> FakeApp {
    let mut app = FakeApp::new("l0");
    for i in 0..n {
        let mut screen = FakeScreen::new();
        if i > 0 {
            screen = screen.nav_back("Back", &format!("l{}", i - 1));
        }
        screen = screen.text(&format!("Level {}", i));
        if i + 1 < n {
            screen = screen.button("Deeper", &format!("l{}", i + 1));
        }
        app = app.screen(&format!("l{}", i), screen);
    }
    app
}

// =========================================================================
// Crawl helpers
// =========================================================================

pub fn config() -> ExplorerConfig {
    ExplorerConfig::default()
}

/// Crawl with tracing and screenshots disabled.
pub fn crawl_quiet(app: &mut FakeApp, config: &ExplorerConfig) -> (ScreenMap, CrawlOutcome) {
    let tracer = TraceLogger::disabled();
    let mut sink = NoScreenshots;
    crawl(app, config, &tracer, &mut sink, "default")
}

pub fn screen_names(map: &ScreenMap) -> Vec<String> {
    map.screens().iter().map(|s| s.name.clone()).collect()
}

// =========================================================================
// Snapshot builders
// =========================================================================

pub fn snapshot(elements: Vec<Element>) -> Snapshot {
    Snapshot::new(elements, &ScreenHasher::default())
}

pub fn text(label: &str) -> Element {
    Element::new(ElementRole::StaticText, label)
}

pub fn button(label: &str) -> Element {
    Element::new(ElementRole::Button, label)
}

pub fn tab(label: &str) -> Element {
    Element::new(ElementRole::Tab, label)
}

pub fn cell(label: &str) -> Element {
    Element::new(ElementRole::Cell, label)
}

pub fn nav_button(label: &str) -> Element {
    Element::new(ElementRole::NavBarButton, label)
}
