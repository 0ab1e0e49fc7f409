//! Invoices shared by the domain unit tests

use super::invoice::{Invoice, RawInvoice};

/// Parses and validates a TOML invoice, panicking on any error
pub fn invoice(toml: &str) -> Invoice {
    let raw: RawInvoice = toml::from_str(toml).expect("a nice clean parse");
    Invoice::build(raw).expect("a valid invoice")
}

pub const GLOBAL_ONLY: &str = r#"
bindleVersion = "1.0.0"

[bindle]
name = "aricebo"
version = "1.2.3"

[[parcel]]
[parcel.label]
sha256 = "aaabbbcccdddeeefff"
name = "telescope.gif"
mediaType = "image/gif"
size = 123_456

[[parcel]]
[parcel.label]
sha256 = "111aaabbbcccdddeee"
name = "telescope.txt"
mediaType = "text/plain"
size = 123_456
"#;

pub const WORKED_SCENARIO: &str = r#"
bindleVersion = "1.0.0"

[bindle]
name = "example/weather"
version = "0.1.0"
authors = ["Matt Butcher <matt.butcher@microsoft.com>"]
description = "Weather prediction"

[[group]]
name = "server"
satisfiedBy = "allOf"

[[group]]
name = "cli"
satisfiedBy = "oneOf"
required = true

[[group]]
name = "utility"
satisfiedBy = "anyOf"

[[parcel]]
[parcel.label]
sha256 = "e1706ab0a39ac88094b6d54a3f5cdba41fe5a901"
mediaType = "application/x-elf"
name = "daemon"
[parcel.conditions]
memberOf = ["server"]
requires = ["utility"]

[[parcel]]
[parcel.label]
sha256 = "a1706ab0a39ac88094b6d54a3f5cdba41fe5a901"
mediaType = "application/x-elf"
name = "first"
[parcel.conditions]
memberOf = ["cli", "utility"]

[[parcel]]
[parcel.label]
sha256 = "5b992e90b71d5fadab3cd3777230ef370df75f5b"
mediaType = "application/x-elf"
name = "second"
[parcel.conditions]
memberOf = ["cli"]

[[parcel]]
[parcel.label]
sha256 = "c1706ab0a39ac88094b6d54a3f5cdba41fe5a901"
mediaType = "application/x-elf"
name = "third"
[parcel.conditions]
memberOf = ["utility"]
"#;

pub const EXCLUDED_PARCEL: &str = r#"
bindleVersion = "1.0.0"

[bindle]
name = "hide"
version = "1.0.0"

[[parcel]]
[parcel.label]
sha256 = "aa"
name = "visible"

[[parcel]]
[parcel.label]
sha256 = "bb"
name = "hidden"
[parcel.conditions]
memberOf = []
"#;

pub const CYCLE: &str = r#"
bindleVersion = "1.0.0"

[bindle]
name = "loop"
version = "1.0.0"

[[group]]
name = "A"

[[group]]
name = "B"

[[parcel]]
[parcel.label]
sha256 = "aa"
name = "p"
[parcel.conditions]
memberOf = ["A"]
requires = ["B"]

[[parcel]]
[parcel.label]
sha256 = "bb"
name = "q"
[parcel.conditions]
memberOf = ["B"]
requires = ["A"]
"#;
