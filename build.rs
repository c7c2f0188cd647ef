// build.rs
//
// Compiles `locales/*.toml` into the `t!` macro used for every user-facing message.
// English is always loaded; a second locale only overrides the keys it defines.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const LOCALES_DIR: &str = "locales";
const BASE_LOCALE: &str = "en";

type Messages = BTreeMap<String, String>;

/// A `lang_*` cargo feature wins over `CHARTY_LANG`.
fn requested_locale() -> String {
    let mut from_features: Vec<String> = env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_LANG_")
                .map(str::to_lowercase)
        })
        .collect();
    from_features.sort();

    match from_features.as_slice() {
        [] => env::var("CHARTY_LANG").unwrap_or_else(|_| BASE_LOCALE.to_string()),
        [only] => only.clone(),
        [first, ..] => {
            println!(
                "cargo:warning=charty: several locale features enabled ({}), building with '{}'",
                from_features.join(", "),
                first
            );
            first.clone()
        }
    }
}

fn read_messages(locale: &str) -> Option<Messages> {
    let path = Path::new(LOCALES_DIR).join(format!("{locale}.toml"));
    let text = fs::read_to_string(&path).ok()?;
    match toml::from_str(&text) {
        Ok(messages) => Some(messages),
        Err(e) => panic!("{} is not a flat table of strings: {}", path.display(), e),
    }
}

/// One arm per key expanding to a string literal, so `format!(t!(..), ..)` still
/// checks its named arguments at compile time.
fn macro_source(messages: &Messages) -> String {
    let mut source = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, text) in messages {
        source.push_str(&format!("    ({key:?}) => {{ {text:?} }};\n"));
    }
    source.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"unknown message key: \", $key)) }};\n}\n",
    );
    source
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={LOCALES_DIR}");
    println!("cargo:rerun-if-env-changed=CHARTY_LANG");

    let locale = requested_locale();
    let mut messages =
        read_messages(BASE_LOCALE).expect("locales/en.toml is required to build charty");
    if locale != BASE_LOCALE {
        match read_messages(&locale) {
            Some(overrides) => messages.extend(overrides),
            None => println!("cargo:warning=charty: no locale '{locale}', using '{BASE_LOCALE}'"),
        }
    }

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    fs::write(
        Path::new(&out_dir).join("translations.rs"),
        macro_source(&messages),
    )
    .expect("failed to write the generated translations");
}
