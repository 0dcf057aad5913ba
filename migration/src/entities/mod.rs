pub mod ip_range;

pub use ip_range::Entity as IpRangeEntity;
