mod line_rate;

pub use self::line_rate::LineRate;
