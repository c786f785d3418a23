//! Implementation of `filebind bindings`.

use crate::{
    binding::BindingStore,
    config::{Config, ConfigArgs},
    Result,
};

pub fn execute(config: &ConfigArgs) -> Result<()> {
    let cfg = Config::from_args(config)?;
    let store = BindingStore::load(&cfg.bindings_path)?;
    print!("{}", format_pairs(&store));
    Ok(())
}

pub fn format_pairs(store: &BindingStore) -> String {
    let mut out = String::new();
    for (a, b) in store.pairs() {
        out.push_str(&format!("{} <-> {}\n", a.display(), b.display()));
    }
    out
}
