//! File and spreadsheet plumbing shared by the commands

pub mod file_utils;
pub mod sheet;
