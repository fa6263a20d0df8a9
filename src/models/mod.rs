mod device;
mod horoscope;
mod report;
mod sign;

pub use device::{Device, NewDevice};
pub use horoscope::{Horoscope, NewHoroscope};
pub use report::{DeliveryReport, GenerationReport, SignOutcome};
pub use sign::ZodiacSign;
