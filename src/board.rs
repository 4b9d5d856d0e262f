//! Board model and config resolution.
//!
//! A board's `menu.*` property subtree declares its configuration axes; each
//! option's legal values are the first-level keys of that option's own
//! subtree. [`Board::get_build_properties`] merges the board's base
//! properties with a user-chosen (or defaulted) value per option, in the
//! menu's declaration order, so default selection is deterministic.

use crate::errors::{Error, Result};
use crate::fqbn::Fqbn;
use crate::props::PropertyStore;

#[derive(Debug, Clone)]
pub struct Board {
    pub id: String,
    /// Owning platform identity, kept as plain keys instead of a back
    /// reference so boards stay freely clonable across scan generations.
    pub package: String,
    pub architecture: String,
    pub properties: PropertyStore,
}

impl Board {
    pub fn new(id: &str, package: &str, architecture: &str, properties: PropertyStore) -> Self {
        Self {
            id: id.to_string(),
            package: package.to_string(),
            architecture: architecture.to_string(),
            properties,
        }
    }

    /// The board name as declared in the definition file.
    pub fn name(&self) -> &str {
        self.properties.get("name").unwrap_or(&self.id)
    }

    /// The FQBN for this board's default configuration.
    pub fn fqbn(&self) -> Fqbn {
        Fqbn::new(&self.package, &self.architecture, &self.id)
    }

    /// Configuration option ids, in declaration order.
    pub fn config_options(&self) -> Vec<String> {
        self.properties.sub_tree("menu").first_level_keys()
    }

    /// Legal values for one option, in declaration order. The first entry is
    /// the default.
    pub fn config_option_values(&self, option: &str) -> Vec<String> {
        self.properties
            .sub_tree("menu")
            .sub_tree(option)
            .first_level_keys()
    }

    /// Resolve the final build properties for the given user configuration.
    ///
    /// Each menu option takes the user-supplied value if present (and removes
    /// it from a working copy), else its first declared value. An illegal
    /// value fails with [`Error::InvalidOptionValue`]; any key left over after
    /// all options are processed fails with [`Error::EmptyOption`] or
    /// [`Error::InvalidOption`].
    pub fn get_build_properties(&self, user_config: &PropertyStore) -> Result<PropertyStore> {
        // user configs are consumed during iteration, work on a copy
        let mut user_config = user_config.clone();
        let mut build_properties = self.properties.clone();

        let menu = self.properties.sub_tree("menu");
        for option in menu.first_level_keys() {
            let option_menu = menu.sub_tree(&option);
            let value = match user_config.remove(&option) {
                Some(user_value) => {
                    if !option_menu.contains_key(&user_value) {
                        return Err(Error::InvalidOptionValue {
                            option,
                            value: user_value,
                        });
                    }
                    user_value
                }
                // apply default; an option with no declared values
                // contributes nothing
                None => match option_menu.first_level_keys().into_iter().next() {
                    Some(default) => default,
                    None => continue,
                },
            };
            build_properties.merge(&option_menu.sub_tree(&value));
        }

        // whatever is left was never a declared option
        if let Some(residual) = user_config.keys().next() {
            if residual.is_empty() {
                return Err(Error::EmptyOption);
            }
            return Err(Error::InvalidOption(residual.to_string()));
        }

        Ok(build_properties)
    }
}
