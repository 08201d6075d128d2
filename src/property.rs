//! Properties, channels and the name-resolution engine.
//!
//! A property with channels is addressed as `<property>_<channel>` (its full
//! name); a property without channels is addressed by its bare name. The
//! engine resolves exact full names through a table built once per list and
//! falls back to token-wise fuzzy matching that refuses to guess: when more
//! than one entry fits, callers get every candidate back.

use crate::catalog::DapVersion;
use crate::error::{DataModelError, Result};
use anyhow::bail;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Index;

/// Separator between property name and channel name in a full name.
pub const FULL_NAME_DELIMITER: char = '_';

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Named sub-index of a property (e.g., one emission line).
pub struct Channel {
    name: String,
    unit: Option<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, unit: Option<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            unit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit override for this channel, if it differs from the property's.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Derived quantity described by the datamodel.
pub struct Property {
    name: String,
    channels: Vec<Channel>,
    unit: Option<String>,
    description: String,
    has_ivar: bool,
    has_mask: bool,
}

impl Property {
    pub fn new(
        name: impl Into<String>,
        channels: Vec<Channel>,
        unit: Option<String>,
        description: impl Into<String>,
        has_ivar: bool,
        has_mask: bool,
    ) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            channels,
            unit,
            description: description.into(),
            has_ivar,
            has_mask,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether an inverse-variance array accompanies the values.
    pub fn has_ivar(&self) -> bool {
        self.has_ivar
    }

    /// Whether a data-quality mask accompanies the values.
    pub fn has_mask(&self) -> bool {
        self.has_mask
    }

    /// Look up a channel by name (case-insensitive).
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        let wanted = name.trim().to_ascii_lowercase();
        self.channels.iter().find(|channel| channel.name == wanted)
    }

    /// Full name for this property with an optional channel appended.
    pub fn full_name(&self, channel: Option<&Channel>) -> String {
        match channel {
            Some(channel) => format!("{}{FULL_NAME_DELIMITER}{}", self.name, channel.name),
            None => self.name.clone(),
        }
    }

    /// Unit for a value of this property; a channel unit overrides the
    /// property unit.
    pub fn unit_for<'a>(&'a self, channel: Option<&'a Channel>) -> Option<&'a str> {
        channel.and_then(Channel::unit).or(self.unit())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Outcome of a successful resolution: a property plus, for channelled
/// properties, the selected channel.
pub struct PropertyMatch<'a> {
    pub property: &'a Property,
    pub channel: Option<&'a Channel>,
}

impl PropertyMatch<'_> {
    pub fn full_name(&self) -> String {
        self.property.full_name(self.channel)
    }

    pub fn unit(&self) -> Option<&str> {
        self.property.unit_for(self.channel)
    }
}

// (property index, channel index) for one addressable full name.
type Slot = (usize, Option<usize>);

#[derive(Clone, Debug)]
/// Ordered, name-unique collection of properties for one DAP version.
pub struct PropertyList {
    dap_version: DapVersion,
    properties: Vec<Property>,
    by_full_name: BTreeMap<String, Slot>,
}

impl PropertyList {
    /// Build a list, rejecting duplicate names and full-name collisions.
    pub fn new(dap_version: DapVersion, properties: Vec<Property>) -> anyhow::Result<Self> {
        let mut names = BTreeSet::new();
        let mut by_full_name = BTreeMap::new();
        for (prop_idx, property) in properties.iter().enumerate() {
            if property.name.trim().is_empty() {
                bail!("property with empty name in DAP {dap_version}");
            }
            if !names.insert(property.name.as_str()) {
                bail!("duplicate property '{}' in DAP {dap_version}", property.name);
            }

            let mut slots: Vec<(String, Slot)> = Vec::new();
            if property.channels.is_empty() {
                slots.push((property.name.clone(), (prop_idx, None)));
            } else {
                let mut channel_names = BTreeSet::new();
                for (chan_idx, channel) in property.channels.iter().enumerate() {
                    if channel.name.trim().is_empty() {
                        bail!("property '{}' has a channel with no name", property.name);
                    }
                    if !channel_names.insert(channel.name.as_str()) {
                        bail!(
                            "property '{}' defines channel '{}' twice",
                            property.name,
                            channel.name
                        );
                    }
                    slots.push((
                        property.full_name(Some(channel)),
                        (prop_idx, Some(chan_idx)),
                    ));
                }
            }

            for (full_name, slot) in slots {
                if by_full_name.insert(full_name.clone(), slot).is_some() {
                    bail!("full name '{full_name}' is defined twice in DAP {dap_version}");
                }
            }
        }

        Ok(Self {
            dap_version,
            properties,
            by_full_name,
        })
    }

    pub fn dap_version(&self) -> &DapVersion {
        &self.dap_version
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Iterates properties in definition order.
    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.properties.iter()
    }

    /// Every addressable full name, in definition order.
    pub fn full_names(&self) -> Vec<String> {
        self.candidates().map(|(_, full_name)| full_name).collect()
    }

    /// Bare property lookup by name, whether or not it has channels.
    pub fn property(&self, name: &str) -> Option<&Property> {
        let wanted = name.trim().to_ascii_lowercase();
        self.properties.iter().find(|property| property.name == wanted)
    }

    /// Resolve user input to exactly one (property, channel) pair.
    ///
    /// `channel`, when given, is appended to `name` with the full-name
    /// delimiter. With `exact` set, the resolved full name must reproduce the
    /// input (case-insensitively) or the lookup fails with `PropertyNotFound`.
    pub fn resolve(
        &self,
        name: &str,
        channel: Option<&str>,
        exact: bool,
    ) -> Result<PropertyMatch<'_>> {
        let query = match channel {
            Some(channel) => format!(
                "{}{FULL_NAME_DELIMITER}{}",
                name.trim(),
                channel.trim()
            ),
            None => name.trim().to_string(),
        }
        .to_ascii_lowercase();

        if let Some(slot) = self.by_full_name.get(&query) {
            return Ok(self.slot_match(*slot));
        }

        let matched = self.fuzzy_match(&query)?;
        if exact && !matched.full_name().eq_ignore_ascii_case(&query) {
            return Err(DataModelError::PropertyNotFound(query));
        }
        Ok(matched)
    }

    /// Non-throwing counterpart of [`resolve`](Self::resolve); every failure,
    /// ambiguity included, becomes `None`.
    pub fn get(&self, name: &str) -> Option<PropertyMatch<'_>> {
        self.resolve(name, None, false).ok()
    }

    /// Membership under the same matching rules as [`get`](Self::get).
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn slot_match(&self, (prop_idx, chan_idx): Slot) -> PropertyMatch<'_> {
        let property = &self.properties[prop_idx];
        PropertyMatch {
            property,
            channel: chan_idx.map(|idx| &property.channels[idx]),
        }
    }

    fn candidates(&self) -> impl Iterator<Item = (Slot, String)> + '_ {
        self.properties
            .iter()
            .enumerate()
            .flat_map(|(prop_idx, property)| {
                let slots: Vec<(Slot, String)> = if property.channels.is_empty() {
                    vec![((prop_idx, None), property.name.clone())]
                } else {
                    property
                        .channels
                        .iter()
                        .enumerate()
                        .map(|(chan_idx, channel)| {
                            ((prop_idx, Some(chan_idx)), property.full_name(Some(channel)))
                        })
                        .collect()
                };
                slots
            })
    }

    fn fuzzy_match(&self, query: &str) -> Result<PropertyMatch<'_>> {
        let tokens: Vec<&str> = query.split(FULL_NAME_DELIMITER).collect();
        if tokens.iter().any(|token| token.is_empty()) {
            return Err(DataModelError::PropertyNotFound(query.to_string()));
        }

        let by_property = self.match_channel_of_longest_property(query);
        let slots = if by_property.is_empty() {
            self.match_tokens(&tokens)
        } else {
            by_property
        };

        match slots.as_slice() {
            [] => Err(DataModelError::PropertyNotFound(query.to_string())),
            [slot] => Ok(self.slot_match(*slot)),
            _ => Err(DataModelError::AmbiguousMatch {
                query: query.to_string(),
                candidates: slots
                    .iter()
                    .map(|slot| self.slot_match(*slot).full_name())
                    .collect(),
            }),
        }
    }

    // Longest channelled property that is a token-aligned prefix of the query
    // and whose remainder selects at least one of its channels.
    fn match_channel_of_longest_property(&self, query: &str) -> Vec<Slot> {
        self.properties
            .iter()
            .enumerate()
            .filter(|(_, property)| property.has_channels())
            .filter_map(|(prop_idx, property)| {
                let remainder = query
                    .strip_prefix(property.name.as_str())
                    .and_then(|rest| rest.strip_prefix(FULL_NAME_DELIMITER))
                    .filter(|rest| !rest.is_empty())?;
                let remainder: Vec<&str> = remainder.split(FULL_NAME_DELIMITER).collect();
                let slots: Vec<Slot> = property
                    .channels
                    .iter()
                    .enumerate()
                    .filter(|(_, channel)| {
                        let channel_tokens: Vec<&str> =
                            channel.name.split(FULL_NAME_DELIMITER).collect();
                        channel_tokens_match(&remainder, &channel_tokens)
                    })
                    .map(|(chan_idx, _)| (prop_idx, Some(chan_idx)))
                    .collect();
                (!slots.is_empty()).then_some((property.name.len(), slots))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, slots)| slots)
            .unwrap_or_default()
    }

    fn match_tokens(&self, tokens: &[&str]) -> Vec<Slot> {
        self.candidates()
            .filter(|(_, full_name)| {
                let full_tokens: Vec<&str> = full_name.split(FULL_NAME_DELIMITER).collect();
                tokens.len() <= full_tokens.len()
                    && tokens
                        .iter()
                        .zip(full_tokens.iter())
                        .all(|(token, full)| full.starts_with(token))
            })
            .map(|(slot, _)| slot)
            .collect()
    }
}

// Every remainder token but the last must equal the channel token; the last may
// abbreviate it.
fn channel_tokens_match(remainder: &[&str], channel: &[&str]) -> bool {
    let Some((last, leading)) = remainder.split_last() else {
        return false;
    };
    if remainder.len() > channel.len() {
        return false;
    }
    leading
        .iter()
        .zip(channel.iter())
        .all(|(token, chan)| token == chan)
        && channel[leading.len()].starts_with(last)
}

impl Index<usize> for PropertyList {
    type Output = Property;

    fn index(&self, index: usize) -> &Property {
        &self.properties[index]
    }
}

impl<'a> IntoIterator for &'a PropertyList {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.iter()
    }
}
