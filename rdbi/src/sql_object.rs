// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Declarative SQL objects
//!
//! ```ignore
//! rdbi::sql_object! {
//!     pub struct Groups {
//!         #[sql_update("insert into groups (id, user_ids) values (:id, :user_ids)")]
//!         fn insert(&mut self, id: i32, user_ids: Vec<i64>) -> usize;
//!
//!         #[sql_query("select user_ids from groups where id = :id")]
//!         fn user_ids(&mut self, id: i32) -> Vec<i64>;
//!
//!         #[sql_query_list("select id from groups order by id")]
//!         fn ids(&mut self) -> Vec<i32>;
//!     }
//! }
//!
//! let mut groups: Groups = handle.attach();
//! groups.insert(1, vec![10, 20])?;
//! ```
//!
//! Every method returns `rdbi::Result<..>` of its declared type and binds each
//! argument under its own name. `sql_query` maps the first column of exactly
//! one row, `sql_query_list` the first column of every row, and `sql_update`
//! returns the number of affected rows.

use crate::handle::Handle;

/// A type that can be attached to a handle
pub trait SqlObject<'h>: Sized {
    fn attach(handle: &'h mut Handle) -> Self;
}

#[macro_export]
macro_rules! sql_object {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                #[$kind:ident($sql:literal)]
                fn $method:ident(&mut self $(, $arg:ident : $ty:ty)* $(,)?) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<'h> {
            handle: &'h mut $crate::Handle,
        }

        impl<'h> $crate::SqlObject<'h> for $name<'h> {
            fn attach(handle: &'h mut $crate::Handle) -> Self {
                Self { handle }
            }
        }

        impl<'h> $name<'h> {
            /// The handle this object is attached to
            #[allow(dead_code)]
            pub fn handle(&mut self) -> &mut $crate::Handle {
                &mut *self.handle
            }

            $(
                #[allow(dead_code)]
                pub fn $method(&mut self $(, $arg: $ty)*) -> $crate::Result<$ret> {
                    $crate::__sql_object_method!($kind, self.handle, $sql $(, $arg)*)
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __sql_object_method {
    (sql_query, $handle:expr, $sql:literal $(, $arg:ident)*) => {
        $handle
            .create_query($sql)
            $(.bind(stringify!($arg), $arg))*
            .map_to()
            .find_only()
    };
    (sql_query_list, $handle:expr, $sql:literal $(, $arg:ident)*) => {
        $handle
            .create_query($sql)
            $(.bind(stringify!($arg), $arg))*
            .map_to()
            .list()
    };
    (sql_update, $handle:expr, $sql:literal $(, $arg:ident)*) => {
        $handle
            .create_update($sql)
            $(.bind(stringify!($arg), $arg))*
            .execute()
    };
}

#[cfg(test)]
mod tests {
    use crate::config::RdbiConfig;
    use crate::driver::{ConnectionFactory, SqliteConnectionFactory};
    use crate::handle::Handle;
    use std::sync::Arc;

    crate::sql_object! {
        struct People {
            #[sql_update("insert into people (id, name) values (:id, :name)")]
            fn add(&mut self, id: i32, name: &str) -> usize;

            #[sql_query("select name from people where id = :id")]
            fn name_of(&mut self, id: i32) -> Option<String>;

            #[sql_query_list("select id from people order by id")]
            fn ids(&mut self) -> Vec<i64>;
        }
    }

    #[test]
    fn test_generated_methods() {
        let connection = SqliteConnectionFactory::memory().open().unwrap();
        let mut handle = Handle::new(connection, Arc::new(RdbiConfig::default())).unwrap();
        handle
            .execute_script("create table people (id integer primary key, name text)")
            .unwrap();

        let mut people: People = handle.attach();
        assert_eq!(people.add(2, "Martin").unwrap(), 1);
        assert_eq!(people.add(1, "Tom").unwrap(), 1);
        assert_eq!(people.name_of(1).unwrap(), Some("Tom".to_string()));
        assert_eq!(people.ids().unwrap(), vec![1, 2]);
        assert!(people.name_of(3).is_err());
    }
}
