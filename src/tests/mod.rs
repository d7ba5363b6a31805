pub(crate) mod support;

mod live;
