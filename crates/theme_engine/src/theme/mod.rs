mod apply;
mod record;
mod store;

pub use apply::{
    apply_theme, entry_transform, load_theme_assets, reapply_theme, AppliedTheme, ApplyError,
    LayerSuppression,
};
pub use record::{theme_slug, ThemeEntry, ThemeRecord};
pub use store::{
    default_location, list_themes, load, parse_theme_json, persist, validate_record,
    ThemeStoreError, ThemeSummary, THEME_FILE_SUFFIX,
};
