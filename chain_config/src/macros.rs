/// Macro to create a configuration value group struct.
///
/// Usage:
/// ```ignore
/// chain_config::config_group!({
///     ref test_int: usize = 42;
///     ref test_string: String = "default".to_string();
/// });
/// ```
///
/// This creates a `ConfigValueGroup` struct with the specified fields. `Default` gives the compiled-in
/// values; `apply_env_overrides` reads `CHAINFETCH_<GROUP>_<FIELD>` where `<GROUP>` is the name of the
/// module the macro is invoked in.
#[macro_export]
macro_rules! config_group {
    ({
        $(
            $(#[$meta:meta])*
            ref $name:ident : $type:ty = $value:expr;
        )+
    }) => {
        #[allow(unused_imports)]
        use $crate::ParsableConfigValue;

        /// ConfigValueGroup struct containing all configurable values
        #[derive(Debug, Clone)]
        pub struct ConfigValueGroup {
            $(
                $(#[$meta])*
                #[allow(non_snake_case)]
                pub $name: $type,
            )+
        }

        impl Default for ConfigValueGroup {
            fn default() -> Self {
                Self {
                    $(
                        $name: {
                            let v: $type = $value;
                            v
                        },
                    )+
                }
            }
        }

        impl AsRef<ConfigValueGroup> for ConfigValueGroup {
            fn as_ref(&self) -> &ConfigValueGroup {
                self
            }
        }

        impl ConfigValueGroup {
            pub fn new() -> Self {
                Self::default()
            }

            /// Apply environment variable overrides to this configuration group.
            ///
            /// For module `chain_config::groups::client`, the variable for `fetch_concurrency` is
            /// `CHAINFETCH_CLIENT_FETCH_CONCURRENCY`.
            pub fn apply_env_overrides(&mut self) {
                $(
                    {
                        const ENV_VAR_NAME: &str = const_str::concat!(
                            "CHAINFETCH_",
                            const_str::convert_ascii_case!(upper, konst::string::rsplit_once(module_path!(), "::").unwrap().1),
                            "_",
                            const_str::convert_ascii_case!(upper, stringify!($name)));

                        let maybe_env_value = std::env::var(ENV_VAR_NAME).ok();
                        let default_value: $type = $value;
                        self.$name = <$type>::parse(ENV_VAR_NAME, maybe_env_value, default_value);
                    }
                )+
            }
        }

        pub type ConfigValues = ConfigValueGroup;
    };
}
