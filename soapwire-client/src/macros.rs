//! Macros for calling SOAP functions with less boilerplate

/// Builds the argument vector for a call from JSON-like expressions.
///
/// Arguments are separated by commas and each one is handed to
/// [`json!`](crate::json), so object and array literals, negative numbers
/// and arbitrary Rust expressions are all accepted.
///
/// # Example
///
/// ```rust
/// use soapwire_client::soap_args;
/// let offset = 2;
/// let args = soap_args![{"blz": "12070000"}, -1, offset + 1];
/// assert_eq!(args.len(), 3);
/// assert_eq!(args[2], 3);
/// ```
#[macro_export]
macro_rules! soap_args {
    (@args [$($done:expr,)*] []) => {
        ::std::vec![$($done,)*]
    };
    (@args [$($done:expr,)*] [$($arg:tt)+]) => {
        ::std::vec![$($done,)* $crate::json!($($arg)+)]
    };
    (@args [$($done:expr,)*] [$($arg:tt)+] , $($rest:tt)*) => {
        $crate::soap_args!(@args [$($done,)* $crate::json!($($arg)+),] [] $($rest)*)
    };
    (@args [$($done:expr,)*] [$($arg:tt)*] $next:tt $($rest:tt)*) => {
        $crate::soap_args!(@args [$($done,)*] [$($arg)* $next] $($rest)*)
    };

    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($tokens:tt)+) => {
        $crate::soap_args!(@args [] [] $($tokens)+)
    };
}

/// Generates a typed wrapper around a [`Proxy`](crate::Proxy) with one async
/// method per WSDL function.
///
/// Each method takes the call's arguments as `Vec<Value>` and
/// forwards to `Proxy::call` with the WSDL function name. The optional
/// `=> "wsdlName"` form maps a Rust method name onto a differently spelled
/// function.
///
/// # Example
///
/// ```rust
/// use soapwire_client::soap_interface;
///
/// soap_interface! {
///     /// BLZ lookup service
///     pub struct BlzService {
///         fn get_bank => "getBank";
///     }
/// }
/// ```
#[macro_export]
macro_rules! soap_interface {
    (@name $method:ident $wsdl:literal) => {
        $wsdl
    };
    (@name $method:ident) => {
        stringify!($method)
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(fn $method:ident $(=> $wsdl:literal)?;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            proxy: $crate::Proxy,
        }

        impl $name {
            pub fn new(client: $crate::Client) -> Self {
                Self {
                    proxy: $crate::Proxy::new(client),
                }
            }

            pub fn proxy(&self) -> &$crate::Proxy {
                &self.proxy
            }

            $(
                pub async fn $method(
                    &self,
                    args: ::std::vec::Vec<$crate::Value>,
                ) -> ::std::result::Result<$crate::Value, $crate::SoapError> {
                    self.proxy
                        .call($crate::soap_interface!(@name $method $($wsdl)?), args)
                        .await
                }
            )*
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_soap_args() {
        let args = soap_args![{"blz": "12070000"}, 5, "text"];
        assert_eq!(args.len(), 3);
        assert_eq!(args[0]["blz"], "12070000");
        assert_eq!(args[1], 5);
        assert_eq!(args[2], "text");
    }

    #[test]
    fn test_soap_args_expressions() {
        let n = 41;
        let name = String::from("Potsdam");
        let args = soap_args![-1, n + 1, name.to_uppercase(), [1, -2], {"ort": name},];
        assert_eq!(args.len(), 5);
        assert_eq!(args[0], -1);
        assert_eq!(args[1], 42);
        assert_eq!(args[2], "POTSDAM");
        assert_eq!(args[3], serde_json::json!([1, -2]));
        assert_eq!(args[4]["ort"], "Potsdam");
    }

    #[test]
    fn test_soap_args_empty() {
        let args: Vec<serde_json::Value> = soap_args![];
        assert!(args.is_empty());
    }
}
