use std::ops::Deref;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

/// A vector that is guaranteed to hold at least one element.
///
/// Serialization round-trips through a plain `Vec`, failing deserialization
/// when the vector is empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(t: T) -> Self {
        Self(vec![t])
    }

    pub fn maybe_new(v: Vec<T>) -> Option<Self> {
        Self::try_from(v).ok()
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }

    /// Return the first element.
    ///
    /// Infallible: the inner vector is never empty.
    pub fn first(&self) -> &T {
        &self.0[0]
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = Error;

    fn try_from(v: Vec<T>) -> Result<NonEmptyVec<T>, Error> {
        if v.is_empty() {
            bail!("cannot create a NonEmptyVec from an empty Vec")
        }
        Ok(NonEmptyVec(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Vec<T> {
        v
    }
}

impl<T: Clone> AsRef<[T]> for NonEmptyVec<T> {
    fn as_ref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

/// Convert a snake_case or camelCase identifier into a space-separated label
/// with each word capitalized.
///
/// e.g. `family_name` becomes `Family Name` and `dateOfBirth` becomes
/// `Date Of Birth`.
pub fn to_human_readable_string(value: impl Into<String>) -> String {
    let spaced = value.into().chars().fold(String::new(), |mut acc, c| {
        if c.is_uppercase() || c == '_' {
            acc.push(' ');
        }
        if c != '_' {
            acc.push(c);
        }
        acc
    });

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
