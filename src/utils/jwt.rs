use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::Error, Algorithm, DecodingKey, EncodingKey,
                   Header, Validation};
use serde::{Deserialize, Serialize};

pub const TOKEN_TTL_SECS: i64 = 86_400;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims { pub sub:String, pub exp:i64 }

pub fn sign(sub:&str, secret:&[u8]) -> Result<String, Error> {
    let c = Claims { sub: sub.into(), exp: Utc::now().timestamp()+TOKEN_TTL_SECS };
    encode(&Header::default(), &c, &EncodingKey::from_secret(secret))
}

pub fn verify(token:&str, secret:&[u8]) -> Result<Claims, Error> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret),
                     &Validation::new(Algorithm::HS256))
        .map(|d| d.claims)
}
