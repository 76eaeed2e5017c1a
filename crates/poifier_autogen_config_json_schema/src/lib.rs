//! Generates `schema.json`, the JSON Schema of POIfier's YAML configuration
//! file, at build time. Editors can use it to validate and autocomplete
//! configuration files.
