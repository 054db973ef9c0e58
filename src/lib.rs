pub mod commands;
pub mod doctor;
pub mod fs_utils;
pub mod ignore;
pub mod namespace;
pub mod paths;
pub mod rootspace;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
