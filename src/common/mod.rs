/*
 * Tagdir
 * Copyright (C) 2021 The Tagdir Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

pub mod constants;
pub mod err;
pub mod log;

lazy_static! {
    static ref TAG_NAME_RE: Regex =
        Regex::new(constants::TAG_NAME_PATTERN).expect("Bad tag name pattern");
}

pub fn get_filename(path: &Path) -> err::TagdirResult<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| err::TagdirError::InvalidPath(path.to_owned()))
}

pub fn valid_tag_name(name: &str) -> bool {
    TAG_NAME_RE.is_match(name)
}

pub fn version_str() -> String {
    format!(
        "{}.{}.{}",
        constants::VERSION.0,
        constants::VERSION.1,
        constants::VERSION.2
    )
}
