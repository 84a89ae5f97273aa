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

use crate::common::constants::TAG_PREFIX;
use crate::common::err::{TagdirError, TagdirResult};
use std::path::{Component, Path, PathBuf};

/// The structured form of a virtual path: `/@tag_1/../@tag_n/(entity/(rest)?)?`.
///
/// The tag prefix of the path is the longest run of leading `@` components.
/// The first component after it, if any, is an entity name, and anything
/// beyond that is an opaque remainder joined back together for pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub tags: Vec<String>,
    pub entity: Option<String>,
    pub rest: Option<PathBuf>,
}

/// Splits a virtual path into its `(tags, entity, rest)` triple.  Pure; the
/// only failures are structural (an empty tag name, or a component that isn't
/// valid unicode).  A `@`-prefixed component appearing after a non-tag
/// component is a literal name, not a tag.
pub fn parse<P: AsRef<Path>>(path: P) -> TagdirResult<ParsedPath> {
    let path = path.as_ref();

    let mut tags = Vec::new();
    let mut entity: Option<String> = None;
    let mut rest = PathBuf::new();
    let mut in_tags = true;

    for comp in path.components() {
        let name = match comp {
            Component::RootDir | Component::CurDir => continue,
            Component::Normal(os) => os
                .to_str()
                .ok_or_else(|| TagdirError::InvalidPath(path.to_owned()))?,
            _ => return Err(TagdirError::InvalidPath(path.to_owned())),
        };

        if in_tags && name.starts_with(TAG_PREFIX) {
            let tag = &name[TAG_PREFIX.len_utf8()..];
            if tag.is_empty() {
                return Err(TagdirError::InvalidPath(path.to_owned()));
            }
            tags.push(tag.to_owned());
        } else if entity.is_none() {
            in_tags = false;
            entity = Some(name.to_owned());
        } else {
            rest.push(name);
        }
    }

    let rest = if rest.as_os_str().is_empty() {
        None
    } else {
        Some(rest)
    };

    Ok(ParsedPath {
        tags,
        entity,
        rest,
    })
}
